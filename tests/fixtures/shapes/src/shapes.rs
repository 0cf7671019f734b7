//! Geometry helpers.

pub struct Circle {
    pub radius: f64,
}

impl Circle {
    pub fn area(&self) -> f64 {
        let r = self.radius;
        std::f64::consts::PI * r * r
    }

    pub fn perimeter(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.radius
    }
}

pub fn unit() -> Circle {
    Circle { radius: 1.0 }
}
