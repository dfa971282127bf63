//! `relayq` has no library code of its own: it is the workspace home for
//! [`relayq_core`], [`relayq_broker`], [`relayq_worker`], and
//! [`relayq_client`], and hosts the end-to-end test suite under `tests/`.
