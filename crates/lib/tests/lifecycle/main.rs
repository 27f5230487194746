mod common;

mod auto_delete_tests;
mod cascade_tests;
mod concurrency_tests;
mod connection_tests;
mod journal_tests;
mod unbind_tests;
