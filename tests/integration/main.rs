//! End-to-end tests: HTTP router → pipeline → OpenLigaDB adapter →
//! provider client, with an in-memory transport in place of the network.

mod mock_transport;
mod scenarios;
