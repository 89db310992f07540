/*!
 * Storage protocol layer
 *
 * Each bucket is served by one client implementing `s3::ObjectStore`:
 * - `s3::S3Client` talks to S3 and S3-compatible services
 * - `mock::MockStore` keeps objects in memory (tests only)
 */

pub mod s3;

#[cfg(test)]
pub mod mock;

pub use s3::ObjectStore;
