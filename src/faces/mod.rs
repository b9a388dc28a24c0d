//! Face-cell connectivity: derivation within a region and matching across
//! regions and partition interfaces.
//!
//! [`build::build_face_connectivity`] scans element sets and produces a
//! [`connectivity::FaceCellConnectivity`] relating every face to the one
//! (boundary) or two (inner) cells sharing it. [`matching::match_faces`]
//! pairs up boundary faces of two disjoint regions -- promoting them from
//! boundary to interface -- and [`matching::match_boundary`] connects
//! boundary patch elements to the interior faces they coincide with.

pub mod build;
pub mod connectivity;
pub mod matching;
