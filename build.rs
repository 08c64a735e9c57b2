use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() {
    let path = Path::new(&env::var("OUT_DIR").unwrap()).join("keywords.rs");
    let mut file = BufWriter::new(File::create(&path).unwrap());

    write!(
        &mut file,
        "pub static KEYWORDS: phf::Map<&'static str, TokenKind> = {}",
        phf_codegen::Map::new()
            .entry("class", "TokenKind::Class")
            .entry("else", "TokenKind::Else")
            .entry("extends", "TokenKind::Extends")
            .entry("false", "TokenKind::False")
            .entry("for", "TokenKind::For")
            .entry("function", "TokenKind::Function")
            .entry("if", "TokenKind::If")
            .entry("let", "TokenKind::Let")
            .entry("new", "TokenKind::New")
            .entry("none", "TokenKind::None")
            .entry("return", "TokenKind::Return")
            .entry("super", "TokenKind::Super")
            .entry("this", "TokenKind::This")
            .entry("true", "TokenKind::True")
            .entry("while", "TokenKind::While")
            .build()
    )
    .unwrap();
    writeln!(&mut file, ";").unwrap(); // Fixed as suggested by clippy
}
