pub mod auth;
pub mod front;

#[cfg(test)]
mod tests;
