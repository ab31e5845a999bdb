mod game;

pub use game::run_demo;
