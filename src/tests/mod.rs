mod test_utils;
mod test_round_trip;
mod test_driver;
