//! Unit-Tests fuer das Peer-Mesh
