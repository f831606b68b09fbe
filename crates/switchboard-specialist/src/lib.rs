//! A single specialist service: persona prompt in, cleaned answer out.

pub mod persona;
pub mod server;

pub use persona::{persona, Persona};
pub use server::{build_router, SpecialistService};
