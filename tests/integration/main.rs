//! End-to-end tests over the public `stratum-client` surface, wired to a
//! local `stratum-backend` pair (no running daemon — `BackendDispatch`'s
//! local-slot path is exercised directly, the same seam the wire path would
//! use for a remote slot).

mod fixture;

mod batch_semantics;
mod chunked_geometry;
mod codec_matrix;
mod flat_lifecycle;
