use std::io;

use tracing::debug;

use crate::mir::{MirError, Module};

/// A consumer of complete MIR modules, such as a native code generator.
pub trait Backend {
    type Output;
    type Error: From<MirError>;

    /// Emits the module. Only called with verified modules, in which every
    /// block is terminated.
    fn emit(&mut self, module: &Module) -> Result<Self::Output, Self::Error>;
}

/// Verifies the module and passes it to the backend.
pub fn hand_off<B: Backend>(module: &Module, backend: &mut B) -> Result<B::Output, B::Error> {
    module.verify()?;
    debug!(
        module = module.name(),
        functions = module.functions().len(),
        "handing module off to backend"
    );
    backend.emit(module)
}

/// Writes the textual form of modules.
pub struct TextBackend<W> {
    writer: W,
}

impl<W> TextBackend<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> TextBackend<W> {
        TextBackend { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Backend for TextBackend<W>
where
    W: io::Write,
{
    type Output = ();
    type Error = BackendError;

    fn emit(&mut self, module: &Module) -> Result<(), BackendError> {
        writeln!(self.writer, "{module}")?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid module: {0}")]
    Mir(#[from] MirError),
    #[error("failed to write module: {0}")]
    Io(#[from] io::Error),
}
