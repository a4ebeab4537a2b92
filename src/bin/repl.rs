use std::{
    error::Error,
    io::{self, Write},
};

use moth::{
    lexer::tokenize,
    parse_expr, parse_script, parse_statements,
    util::fmt::tree::{debug_string_indented, TreeNode},
};

fn main() {
    if let Err(error) = run() {
        println!("failed to run: {error}");
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut input = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        let n = io::stdin().read_line(&mut input)?;

        if n == 0 {
            println!("^D");
            return Ok(());
        }

        match tokenize(&input) {
            Ok(tokens) => println!("{tokens:?}"),
            Err(error) => {
                println!("error: {error}");
                continue;
            }
        }
        print_tree(&input);
    }
}

/// Lines starting with `namespace` are scripts, lines ending with `;` or `}`
/// are statements. Anything else is an expression.
fn print_tree(input: &str) {
    let line = input.trim();
    let result = if line.starts_with("namespace") {
        parse_script(line).map(|s| render(&s))
    } else if line.ends_with([';', '}']) {
        parse_statements(line).map(|s| render(&s))
    } else {
        parse_expr(line).map(|e| render(&e))
    };
    match result {
        Ok(tree) => println!("{tree}"),
        Err(error) => println!("error: {error}"),
    }
}

fn render(node: &dyn TreeNode) -> String {
    debug_string_indented(node, 0)
}
