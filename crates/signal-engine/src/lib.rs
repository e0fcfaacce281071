pub mod scorer;

#[cfg(test)]
mod tests;

pub use scorer::*;
