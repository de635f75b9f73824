//! Observability: structured diagnostics emitted by the forge.
pub mod sink;

#[cfg(test)]
mod tests;
