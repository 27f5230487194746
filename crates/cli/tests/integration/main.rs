mod common;

mod bind_tests;
mod journal_tests;
mod topology_tests;
