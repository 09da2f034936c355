//! Charts module - State accident maps

mod state_map;

pub use state_map::{
    clean_coordinates, coordinate_points, map_state, plot_accidents, state_accidents, MapOutcome,
    StateMap, LATITUDE_SENTINEL, LONGITUDE_SENTINEL,
};
