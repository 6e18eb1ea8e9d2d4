pub mod helpers;
mod paths;
mod workspace;
