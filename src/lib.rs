//MIT License
pub mod parsing;
pub mod symbolic;
