use std::fmt::{self, Write};

const INDENT_WIDTH: usize = 2;

/// A node which can be rendered by the debug printer.
///
/// Nodes enumerate their fields explicitly, in declaration order. The printer
/// never inspects a node in any other way.
pub trait TreeNode {
    fn tag(&self) -> &'static str;

    fn fields(&self) -> Vec<(&'static str, Field<'_>)>;
}

/// A renderable field value.
pub enum Field<'a> {
    Null,
    /// Rendered between double quotes.
    Str(&'a str),
    Node(&'a dyn TreeNode),
    List(Vec<Field<'a>>),
    /// Rendered as is.
    Value(String),
}

impl<'a> Field<'a> {
    pub fn node(node: &'a impl TreeNode) -> Field<'a> {
        Field::Node(node)
    }

    pub fn opt_node<T: TreeNode>(node: Option<&'a T>) -> Field<'a> {
        node.map_or(Field::Null, |node| Field::Node(node))
    }

    pub fn nodes<T: TreeNode + 'a>(nodes: impl IntoIterator<Item = &'a T>) -> Field<'a> {
        Field::List(nodes.into_iter().map(|n| Field::Node(n)).collect())
    }

    pub fn value(value: impl fmt::Display) -> Field<'a> {
        Field::Value(value.to_string())
    }

    /// Whether this field renders as a single token, never spanning multiple
    /// lines.
    fn is_scalar(&self) -> bool {
        matches!(self, Field::Null | Field::Str(_) | Field::Value(_))
    }
}

/// Renders the node in a single line, such as `Tag { a = 1, b = "x" }`.
pub fn debug_string(node: &dyn TreeNode) -> String {
    Tree { node, indent: None }.to_string()
}

/// Renders the node as an indented block. Nodes with more than one field, or
/// whose single field is a node or a list, span multiple lines. Every item of
/// a non-empty list goes on its own line.
pub fn debug_string_indented(node: &dyn TreeNode, indent: usize) -> String {
    Tree {
        node,
        indent: Some(indent),
    }
    .to_string()
}

struct Tree<'a> {
    node: &'a dyn TreeNode,
    indent: Option<usize>,
}

impl fmt::Display for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.indent {
            Some(i) => {
                sp(f, i)?;
                print_node(f, i, self.node)
            }
            None => print_inline_node(f, self.node),
        }
    }
}

fn print_inline_node(w: &mut impl Write, node: &dyn TreeNode) -> fmt::Result {
    let fields = node.fields();
    w.write_str(node.tag())?;
    if fields.is_empty() {
        return w.write_str(" {}");
    }
    w.write_str(" { ")?;
    for (idx, (name, field)) in fields.iter().enumerate() {
        if idx > 0 {
            w.write_str(", ")?;
        }
        write!(w, "{name} = ")?;
        print_inline_field(w, field)?;
    }
    w.write_str(" }")
}

fn print_inline_field(w: &mut impl Write, field: &Field<'_>) -> fmt::Result {
    match field {
        Field::Null => w.write_str("null"),
        Field::Str(s) => write!(w, "\"{s}\""),
        Field::Value(v) => w.write_str(v),
        Field::Node(node) => print_inline_node(w, *node),
        Field::List(items) => {
            w.write_char('[')?;
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    w.write_str(", ")?;
                }
                print_inline_field(w, item)?;
            }
            w.write_char(']')
        }
    }
}

/// Prints the node starting at the current column. Following lines are
/// indented by `i` levels; the closing brace lines up with the tag.
fn print_node(w: &mut impl Write, i: usize, node: &dyn TreeNode) -> fmt::Result {
    let fields = node.fields();
    let multiline = match fields.as_slice() {
        [] => false,
        [(_, field)] => !field.is_scalar(),
        _ => true,
    };
    if !multiline {
        return print_inline_node(w, node);
    }

    writeln!(w, "{} {{", node.tag())?;
    for (idx, (name, field)) in fields.iter().enumerate() {
        if idx > 0 {
            writeln!(w, ",")?;
        }
        sp(w, i + 1)?;
        write!(w, "{name} = ")?;
        print_field(w, i + 1, field)?;
    }
    writeln!(w)?;
    sp(w, i)?;
    w.write_char('}')
}

fn print_field(w: &mut impl Write, i: usize, field: &Field<'_>) -> fmt::Result {
    match field {
        Field::Node(node) => print_node(w, i, *node),
        Field::List(items) if !items.is_empty() => {
            writeln!(w, "[")?;
            for item in items {
                sp(w, i + 1)?;
                print_field(w, i + 1, item)?;
                writeln!(w, ",")?;
            }
            sp(w, i)?;
            w.write_char(']')
        }
        scalar_or_empty_list => print_inline_field(w, scalar_or_empty_list),
    }
}

fn sp(w: &mut impl Write, i: usize) -> fmt::Result {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
