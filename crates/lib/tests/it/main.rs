/*! Integration tests for docmesh.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * - resolve: reference expansion through the client, dedup, cycles, scope
 * - cache: codec round trips and the shared second tier
 * - transaction: isolation, commit merge and rollback
 * - batch: fan-out of creates, updates and deletes
 * - cancel: cancellation and deadlines
 * - mapping: record registration and sub-collections
 * - query: filtered reads and cache warming
 * - persistence: saving and loading the in-memory store
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("docmesh=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod batch;
mod cache;
mod helpers;
mod mapping;
mod persistence;
mod query;
mod resolve;
mod transaction;
