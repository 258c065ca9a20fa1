//! Vigil integration tests.
//!
//! The harness wires several replica stores together over the in-process
//! transport so whole-cluster behavior (convergence, causal deferral,
//! clock monotonicity) can be driven deterministically, one gossip round
//! at a time.

pub mod causality;
pub mod convergence;
pub mod harness;

pub use harness::ReplicaCluster;

/// Install a fmt subscriber honoring `RUST_LOG`, once per process. Handy
/// when a scenario needs its gossip trace on stdout.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
