use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::parser::traits::FileReader;

/// Local filesystem reader. Invalid UTF-8 is replaced, never rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    fn open_lines(&self, path: &str) -> io::Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}
