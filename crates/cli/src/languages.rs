use crate::view::LanguageView;
use tabled::Table;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = smelter_runtime::default_registry();
    let rows: Vec<LanguageView> = registry
        .iter()
        .map(|spec| LanguageView::from_spec(spec))
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
