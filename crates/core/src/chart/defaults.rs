//! Default chart of accounts, following the Spanish general chart (PGC).

use super::types::{AccountType, NewAccount};

/// Returns the default chart seeded on a fresh ledger.
///
/// Covers every account the automated postings reference with their default
/// configuration.
#[must_use]
pub fn default_chart() -> Vec<NewAccount> {
    use AccountType::{Asset, Equity, Expense, Liability, Revenue, Tax};

    [
        ("100000", "Capital social", Equity),
        ("129000", "Resultado del ejercicio", Equity),
        ("400000", "Proveedores", Liability),
        ("410000", "Acreedores por prestaciones de servicios", Liability),
        ("430000", "Clientes", Asset),
        ("465000", "Remuneraciones pendientes de pago", Liability),
        ("472000", "H.P. IVA soportado", Tax),
        ("473000", "H.P. retenciones y pagos a cuenta", Tax),
        ("475000", "H.P. acreedora por IVA", Tax),
        ("475100", "H.P. acreedora por retenciones practicadas", Tax),
        ("475200", "H.P. acreedora por impuesto sobre sociedades", Tax),
        ("477000", "H.P. IVA repercutido", Tax),
        ("551000", "Cuenta corriente con socios", Liability),
        ("555000", "Partidas pendientes de aplicación", Asset),
        ("570000", "Caja", Asset),
        ("572000", "Bancos", Asset),
        ("600000", "Compras", Expense),
        ("607000", "Trabajos realizados por otras empresas", Expense),
        ("621000", "Arrendamientos y cánones", Expense),
        ("626000", "Servicios bancarios y similares", Expense),
        ("628000", "Suministros", Expense),
        ("629000", "Otros servicios", Expense),
        ("630000", "Impuesto sobre beneficios", Expense),
        ("640000", "Sueldos y salarios", Expense),
        ("640100", "Retribución de socios", Expense),
        ("642000", "Seguridad Social a cargo de la empresa", Expense),
        ("669000", "Otros gastos financieros", Expense),
        ("700000", "Ventas de mercaderías", Revenue),
        ("705000", "Prestaciones de servicios", Revenue),
        ("759000", "Ingresos por servicios diversos", Revenue),
        ("769000", "Otros ingresos financieros", Revenue),
    ]
    .into_iter()
    .map(|(code, name, account_type)| NewAccount::new(code, name, account_type))
    .collect()
}
