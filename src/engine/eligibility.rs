use crate::models::provider::Provider;
use crate::models::request::ServiceKind;

/// Service-specific fitness rules, applied after the class-support check.
pub trait ServiceRules: Send + Sync {
    fn validate(&self, service_class: &str, provider: &Provider) -> bool;
}

pub fn rules_for(service: ServiceKind) -> &'static dyn ServiceRules {
    match service {
        ServiceKind::Transport => &TransportRules,
        ServiceKind::Emergency => &EmergencyRules,
        ServiceKind::Moving => &MovingRules,
        ServiceKind::Hire => &HireRules,
    }
}

pub fn is_eligible(provider: &Provider, service: ServiceKind, service_class: &str) -> bool {
    supports_class(provider, service_class)
        && rules_for(service).validate(service_class, provider)
        && provider.is_dispatchable()
}

pub fn supports_class(provider: &Provider, service_class: &str) -> bool {
    if let Some(enabled) = provider.enabled_classes.get(service_class) {
        return *enabled;
    }

    if provider
        .service_classes
        .iter()
        .any(|class| class == service_class)
    {
        return true;
    }

    match provider.subcategory.as_deref() {
        Some(subcategory) => subcategory_classes(subcategory).contains(&service_class),
        None => false,
    }
}

fn subcategory_classes(subcategory: &str) -> &'static [&'static str] {
    match subcategory {
        "Taxi" => &["compact", "standard", "suv"],
        "Bike" => &["bike_economy", "bike_luxury"],
        "Bus" => &["bus_charter", "bus_mini", "bus_standard", "bus_large"],
        "Tricycle" => &["tricycle"],
        _ => &[],
    }
}

pub struct TransportRules;

impl TransportRules {
    fn required_subcategory(service_class: &str) -> Option<&'static str> {
        match service_class {
            "tricycle" => Some("Tricycle"),
            "compact" | "standard" | "suv" => Some("Taxi"),
            "bike_economy" | "bike_luxury" => Some("Bike"),
            "bus_charter" | "bus_mini" | "bus_standard" | "bus_large" => Some("Bus"),
            _ => None,
        }
    }

    fn bus_capacity_floor(service_class: &str) -> u32 {
        match service_class {
            "bus_mini" => 8,
            "bus_standard" => 14,
            "bus_large" => 20,
            "bus_charter" => 30,
            _ => 4,
        }
    }
}

impl ServiceRules for TransportRules {
    fn validate(&self, service_class: &str, provider: &Provider) -> bool {
        if let Some(required) = Self::required_subcategory(service_class) {
            if provider.subcategory.as_deref() != Some(required) {
                return false;
            }
        }

        if service_class.starts_with("bus_")
            && provider.vehicle_capacity < Self::bus_capacity_floor(service_class)
        {
            return false;
        }

        true
    }
}

pub struct EmergencyRules;

impl EmergencyRules {
    fn required_certifications(service_class: &str) -> &'static [&'static str] {
        match service_class {
            "ambulance" => &["medical_transport", "first_aid"],
            "fire_services" => &["fire_safety", "emergency_response"],
            "security_services" => &["security_license"],
            "towing_van" => &["towing_license", "commercial_driving_license"],
            "roadside_tyre_fix" => &["automotive_repair", "tyre_specialist"],
            "roadside_battery" => &["automotive_electrical", "battery_specialist"],
            "roadside_fuel" => &["fuel_handling_license"],
            "roadside_mechanic" => &["automotive_repair", "mechanical_certification"],
            "roadside_lockout" => &["locksmith_certification"],
            "roadside_jumpstart" => &["automotive_electrical"],
            _ => &[],
        }
    }
}

impl ServiceRules for EmergencyRules {
    fn validate(&self, service_class: &str, provider: &Provider) -> bool {
        if provider.enabled_classes.get(service_class) != Some(&true) {
            return false;
        }

        let required = Self::required_certifications(service_class);
        if required.is_empty() {
            return true;
        }

        required
            .iter()
            .any(|cert| provider.certifications.iter().any(|held| held == cert))
    }
}

pub struct HireRules;

impl ServiceRules for HireRules {
    fn validate(&self, service_class: &str, provider: &Provider) -> bool {
        provider.enabled_classes.get(service_class) == Some(&true)
            || provider.skills.iter().any(|skill| skill == service_class)
    }
}

pub struct MovingRules;

impl MovingRules {
    fn compatible_vehicles(service_class: &str) -> &'static [&'static str] {
        match service_class {
            "truck_small" => &["truck", "pickup"],
            "truck_medium" | "truck_large" => &["truck"],
            "pickup_small" | "pickup_large" => &["pickup"],
            "courier_bike" => &["bike", "motorcycle"],
            "courier_intracity" => &["bike", "motorcycle", "car"],
            "courier_intrastate" => &["car", "van"],
            "courier_nationwide" => &["van", "truck"],
            _ => &[],
        }
    }
}

impl ServiceRules for MovingRules {
    fn validate(&self, service_class: &str, provider: &Provider) -> bool {
        if provider.enabled_classes.get(service_class) == Some(&true) {
            return true;
        }

        let Some(vehicle_type) = provider.vehicle_type.as_deref() else {
            return false;
        };
        let vehicle_type = vehicle_type.to_lowercase();
        Self::compatible_vehicles(service_class)
            .iter()
            .any(|compatible| *compatible == vehicle_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn provider(service: ServiceKind) -> Provider {
        Provider::new("test", service, GeoPoint::new(6.5, 3.4))
    }

    #[test]
    fn enablement_map_overrides_class_list() {
        let mut p = provider(ServiceKind::Transport);
        p.service_classes = vec!["standard".to_string()];
        p.enabled_classes.insert("standard".to_string(), false);
        assert!(!supports_class(&p, "standard"));

        p.enabled_classes.insert("standard".to_string(), true);
        assert!(supports_class(&p, "standard"));
    }

    #[test]
    fn subcategory_fallback_covers_unlisted_classes() {
        let mut p = provider(ServiceKind::Transport);
        p.subcategory = Some("Taxi".to_string());
        assert!(supports_class(&p, "suv"));
        assert!(!supports_class(&p, "bike_economy"));
    }

    #[test]
    fn bare_provider_supports_nothing() {
        let p = provider(ServiceKind::Transport);
        assert!(!supports_class(&p, "standard"));
    }

    #[test]
    fn transport_requires_matching_subcategory() {
        let mut p = provider(ServiceKind::Transport);
        p.subcategory = Some("Bike".to_string());
        assert!(!TransportRules.validate("standard", &p));
        assert!(TransportRules.validate("bike_luxury", &p));
    }

    #[test]
    fn bus_capacity_floor_is_enforced() {
        let mut p = provider(ServiceKind::Transport);
        p.subcategory = Some("Bus".to_string());

        p.vehicle_capacity = 10;
        assert!(TransportRules.validate("bus_mini", &p));
        assert!(!TransportRules.validate("bus_standard", &p));

        p.vehicle_capacity = 6;
        assert!(!TransportRules.validate("bus_mini", &p));

        p.vehicle_capacity = 30;
        assert!(TransportRules.validate("bus_charter", &p));
    }

    #[test]
    fn emergency_requires_explicit_enablement() {
        let mut p = provider(ServiceKind::Emergency);
        p.subcategory = Some("Taxi".to_string());
        p.certifications = vec!["fuel_handling_license".to_string()];
        assert!(!EmergencyRules.validate("roadside_fuel", &p));

        p.enabled_classes.insert("roadside_fuel".to_string(), true);
        assert!(EmergencyRules.validate("roadside_fuel", &p));
    }

    #[test]
    fn any_one_required_certification_suffices() {
        let mut p = provider(ServiceKind::Emergency);
        p.enabled_classes.insert("ambulance".to_string(), true);
        assert!(!EmergencyRules.validate("ambulance", &p));

        p.certifications = vec!["first_aid".to_string()];
        assert!(EmergencyRules.validate("ambulance", &p));

        p.certifications = vec!["medical_transport".to_string()];
        assert!(EmergencyRules.validate("ambulance", &p));
    }

    #[test]
    fn hire_accepts_skill_or_enablement() {
        let mut p = provider(ServiceKind::Hire);
        assert!(!HireRules.validate("plumber", &p));

        p.skills = vec!["plumber".to_string()];
        assert!(HireRules.validate("plumber", &p));

        let mut q = provider(ServiceKind::Hire);
        q.enabled_classes.insert("electrician".to_string(), true);
        assert!(HireRules.validate("electrician", &q));
    }

    #[test]
    fn moving_matches_vehicle_type_case_insensitively() {
        let mut p = provider(ServiceKind::Moving);
        p.vehicle_type = Some("Truck".to_string());
        assert!(MovingRules.validate("truck_large", &p));
        assert!(MovingRules.validate("truck_small", &p));
        assert!(!MovingRules.validate("pickup_small", &p));
        assert!(!MovingRules.validate("courier_bike", &p));
    }

    #[test]
    fn moving_without_vehicle_needs_enablement() {
        let mut p = provider(ServiceKind::Moving);
        assert!(!MovingRules.validate("courier_bike", &p));

        p.enabled_classes.insert("courier_bike".to_string(), true);
        assert!(MovingRules.validate("courier_bike", &p));
    }

    #[test]
    fn full_check_gates_on_dispatchability() {
        let mut p = provider(ServiceKind::Transport);
        p.subcategory = Some("Taxi".to_string());
        assert!(is_eligible(&p, ServiceKind::Transport, "standard"));

        p.online = false;
        assert!(!is_eligible(&p, ServiceKind::Transport, "standard"));
    }
}
