//! Dynamic connectivity over Euler tours.
//!
//! Each connected component is one closed tour: the Euler tour of a spanning
//! tree of the component, every tree edge appearing twice. Non-tree ("spare")
//! edges are tracked per tour so that removing a tree edge can consult them
//! before declaring the component split. The index maps every node to at most
//! one tour and keeps that partition consistent across links and cuts, with
//! the smaller side of every merge paying the remap cost.

pub use index::{CutOutcome, Edge, EulerTourIndex, TourId, canonize_edge, flip_edge};
pub use tour::EulerTour;

mod index;
mod tour;
