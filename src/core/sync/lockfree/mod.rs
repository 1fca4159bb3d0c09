/*!
 * Lock-Free Synchronization Primitives
 *
 * Primitives built purely on hardware atomics: never block, never spin on a lock.
 */

mod counter;

// Re-export public API
pub use counter::AtomicCounter;
