pub mod builtin;
pub mod compiler;
pub mod console;
pub mod floating;
pub mod general;
pub mod inner;
pub mod messages;
pub mod selftest;
pub mod tools;
pub mod tui;
