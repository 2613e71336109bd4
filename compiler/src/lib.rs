pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;

pub use ast::Program;
pub use codegen::{CodeGenerator, CompiledProgram};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
