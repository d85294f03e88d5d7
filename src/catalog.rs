use crate::models::request::ServiceKind;

pub fn classes_for(service: ServiceKind) -> &'static [&'static str] {
    match service {
        ServiceKind::Transport => &[
            "tricycle",
            "compact",
            "standard",
            "suv",
            "bike_economy",
            "bike_luxury",
            "bus_charter",
            "bus_mini",
            "bus_standard",
            "bus_large",
        ],
        ServiceKind::Moving => &[
            "truck_small",
            "truck_medium",
            "truck_large",
            "pickup_small",
            "pickup_large",
            "courier_bike",
            "courier_intracity",
            "courier_intrastate",
            "courier_nationwide",
        ],
        ServiceKind::Emergency => &[
            "ambulance",
            "fire_services",
            "security_services",
            "towing_van",
            "roadside_tyre_fix",
            "roadside_battery",
            "roadside_fuel",
            "roadside_mechanic",
            "roadside_lockout",
            "roadside_jumpstart",
        ],
        ServiceKind::Hire => &[
            "plumber",
            "electrician",
            "hairstylist",
            "cleaner",
            "tutor",
            "carpenter",
            "painter",
            "mechanic",
        ],
    }
}

pub fn is_known_class(service: ServiceKind, class: &str) -> bool {
    classes_for(service).contains(&class)
}
