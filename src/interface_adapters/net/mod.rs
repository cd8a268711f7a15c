// Network adapter modules split by client sockets vs internal HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::stats_handler;
