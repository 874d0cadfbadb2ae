/*!
 * Synchronization Primitives
 * Copy-on-write cells for read-mostly shared state
 */

mod rcu;

pub use rcu::RcuCell;
