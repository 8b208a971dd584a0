//! Concrete processors, one per priority tier: spline (0), overshoot (1),
//! matrix/SQT composer (2), rig (3). See [`crate::engine::Engine::advance`].

pub mod composer;
pub mod matrix_op;
pub mod overshoot;
pub mod rig;
pub mod spline;
