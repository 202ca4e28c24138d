mod confirmed;

pub use confirmed::*;
