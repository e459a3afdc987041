//! Reads a file (or a built-in sample) once and consumes it from two threads:
//! one counts lines and characters, the other prints the first line.
//!
//! ```text
//! RUST_LOG=debug cargo run -p branchio --example tee_lines -- some.txt
//! ```
#![allow(missing_docs)]

use std::{env, error::Error, fs::File, io::Cursor, thread};

use branchio::{TextBranch, TextOptions};

const SAMPLE: &[u8] = b"\xEF\xBB\xBFfirst line\nsecond line\nthird\n";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let root = match env::args().nth(1) {
        Some(path) => TextBranch::from_bytes(File::open(path)?, TextOptions::default())?,
        None => TextBranch::from_bytes(Cursor::new(SAMPLE), TextOptions::default())?,
    };
    println!("encoding: {}", root.encoding().unwrap_or("unknown"));

    let mut counter = root.fork()?;
    let mut preview = root.fork()?;
    root.close();

    let (chars, lines) = thread::scope(|scope| -> Result<_, Box<dyn Error>> {
        let counting = scope.spawn(move || -> branchio::Result<(usize, usize)> {
            let mut buf = ['\0'; 1024];
            let mut chars = 0;
            loop {
                match counter.read(&mut buf)? {
                    0 => break,
                    n => chars += n,
                }
            }
            Ok((chars, counter.line()))
        });

        let mut first = String::new();
        while let Some(ch) = preview.read_unit()? {
            if preview.line() > 1 {
                break;
            }
            first.push(ch);
        }
        preview.close();
        println!("first line: {:?}", first.trim_end());

        let counted = counting.join().map_err(|_| "counting thread panicked")?;
        Ok(counted?)
    })?;

    println!("{chars} characters on {lines} lines");
    Ok(())
}
