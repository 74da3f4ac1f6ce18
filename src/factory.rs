// Factory Method: one factory interface, one concrete factory/product pair.
// Every call allocates a fresh product; nothing is cached or shared.

use log::info;

pub trait Product {
    /// Reports the owner this product was built for.
    fn use_product(&self) -> String;
}

pub trait Factory {
    fn factory_method(&self, owner: &str) -> Box<dyn Product>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteProduct {
    owner: String,
}

impl ConcreteProduct {
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Product for ConcreteProduct {
    fn use_product(&self) -> String {
        let report = format!("owner: {}", self.owner);
        info!("{}", report);
        report
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConcreteFactory;

impl Factory for ConcreteFactory {
    fn factory_method(&self, owner: &str) -> Box<dyn Product> {
        Box::new(ConcreteProduct {
            owner: owner.to_string(),
        })
    }
}

// Compile-time check that the concrete types satisfy their interfaces.
const _: fn() = || {
    fn implements_product<T: Product>() {}
    fn implements_factory<T: Factory>() {}
    implements_product::<ConcreteProduct>();
    implements_factory::<ConcreteFactory>();
};
