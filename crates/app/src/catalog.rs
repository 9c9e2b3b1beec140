//! Products seeded into a fresh store.

use common::{Money, ProductId};
use domain::Product;

const SEED: &[(i64, &str, i64, &str, u32)] = &[
    (1, "Leche Lala Entera 1L", 2_850, "Leche", 50),
    (2, "Leche Santa Clara Entera 6 pack", 23_000, "Leche", 30),
    (3, "Leche Alpura Entera 6 pack", 18_000, "Leche", 25),
    (4, "Leche Lala Deslactosada 6 pack", 15_900, "Leche", 20),
    (5, "Yogurt Lala Fresa 8 pack", 7_000, "Yogurt", 25),
    (6, "Yogurt Alpura Natural 1kg", 4_200, "Yogurt", 30),
    (7, "Yogurt Danone Griego 150g", 1_800, "Yogurt", 40),
    (8, "Mantequilla Lala Sin Sal 90g", 2_400, "Mantequilla y Margarina", 20),
    (9, "Margarina Primavera 225g", 1_800, "Mantequilla y Margarina", 25),
    (10, "Chokis Marinela 300g", 10_700, "Snacks", 10),
    (11, "Sponch Marinela 700g", 7_950, "Snacks", 8),
    (12, "Sabritas Original 20g", 1_800, "Snacks", 50),
    (13, "Doritos Rojos 75g", 1_800, "Snacks", 40),
    (14, "Gansito Marinela 3 piezas", 5_090, "Snacks", 15),
    (15, "Pinol El Original 5.1L", 17_900, "Productos de Limpieza", 10),
    (16, "Detergente Ariel 9kg", 38_900, "Productos de Limpieza", 6),
    (17, "Aspiradora Koblenz", 129_900, "Hogar", 3),
    (18, "Horno de Microondas Mabe", 219_900, "Hogar", 2),
];

/// The default catalog. Every price is positive, so construction cannot fail.
pub fn seed_products() -> Vec<Product> {
    SEED.iter()
        .filter_map(|&(id, name, cents, category, stock)| {
            Product::new(ProductId::new(id), name, Money::from_cents(cents), category, stock).ok()
        })
        .collect()
}
