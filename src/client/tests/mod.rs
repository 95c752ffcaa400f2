mod engine;
mod repl;
mod selftest;
