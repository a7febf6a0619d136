mod go_test;

pub use go_test::GoTestRunner;
