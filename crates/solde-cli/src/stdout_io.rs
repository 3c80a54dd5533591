use std::io::{self, Write};

pub fn write_stdout_text(text: &str) -> io::Result<()> {
    write_stdout(text, false)
}

pub fn write_stdout_line(text: &str) -> io::Result<()> {
    write_stdout(text, true)
}

/// A closed pipe (`solde balance show acct1 | head`) is not an error.
fn write_stdout(text: &str, newline: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    let written = stdout
        .write_all(text.as_bytes())
        .and_then(|()| {
            if newline {
                stdout.write_all(b"\n")
            } else {
                Ok(())
            }
        })
        .and_then(|()| stdout.flush());
    tolerate_broken_pipe(written)
}

fn tolerate_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}
