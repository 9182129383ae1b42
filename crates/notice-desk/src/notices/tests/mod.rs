pub(crate) mod common;
mod routing;
