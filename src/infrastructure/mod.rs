//! Infrastructure layer: the relational store and the vector index client

pub mod database;
pub mod vector;
