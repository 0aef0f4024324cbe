//! External delivery channels for side effects.

pub mod email;
