pub mod br_market;
