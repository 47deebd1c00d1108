pub mod city_location;
pub mod history_frame;
pub mod location_directory;
pub mod sync_result;
pub mod weather_code;
pub mod weather_record;
