pub mod manager_tests;
