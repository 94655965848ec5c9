
mod resolver_tests;
mod selector_tests;
mod submission_tests;
