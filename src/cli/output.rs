//! CLI output: writes a rendered response to the process channels.

use crate::envelope::Rendered;
use std::io::{self, Write};

/// Write primary bytes to `stdout` and secondary bytes to `stderr`, then flush both.
pub fn write_rendered<O, E>(rendered: &Rendered, stdout: &mut O, stderr: &mut E) -> io::Result<()>
where
    O: Write,
    E: Write,
{
    stdout.write_all(&rendered.primary)?;
    stdout.flush()?;
    stderr.write_all(&rendered.secondary)?;
    stderr.flush()
}

/// [`write_rendered`] on the real process streams.
pub fn emit(rendered: &Rendered) -> io::Result<()> {
    let stdout = io::stdout();
    let stderr = io::stderr();
    write_rendered(rendered, &mut stdout.lock(), &mut stderr.lock())
}
