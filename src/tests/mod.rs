pub mod e2e_tests;
