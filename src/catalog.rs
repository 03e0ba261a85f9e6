use crate::snapshot::ParamRow;

pub const GROUP_ABOUT: &str = "О программе";
pub const GROUP_COST: &str = "Стоимость и места";
pub const GROUP_ADMISSION: &str = "Поступление и конкурс";

/// One entry of the hand-authored display catalog.
pub struct ParamSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub subgroup: &'static str,
}

/// The fixed set of compared params. Keys are stable join identifiers into
/// the values relation; display order is declaration order, and subgroup
/// headers follow order of first appearance.
pub const PARAMS: &[ParamSpec] = &[
    ParamSpec { key: "level", title: "Уровень", subgroup: GROUP_ABOUT },
    ParamSpec { key: "napr", title: "Направление", subgroup: GROUP_ABOUT },
    ParamSpec { key: "oprog", title: "О программе", subgroup: GROUP_ABOUT },
    ParamSpec { key: "institute", title: "Институт", subgroup: GROUP_ABOUT },
    ParamSpec { key: "form", title: "Форма обучения", subgroup: GROUP_ABOUT },
    ParamSpec { key: "army_deferral", title: "Отсрочка от армии", subgroup: GROUP_ABOUT },
    ParamSpec { key: "format", title: "Формат обучения", subgroup: GROUP_ABOUT },
    ParamSpec { key: "year", title: "Год", subgroup: GROUP_COST },
    ParamSpec { key: "price", title: "Стоимость", subgroup: GROUP_COST },
    ParamSpec { key: "dogovor", title: "Места (договор)", subgroup: GROUP_COST },
    ParamSpec { key: "budget", title: "Места (бюджет)", subgroup: GROUP_COST },
    ParamSpec {
        key: "score_prev_budget",
        title: "Проходной балл (бюджет, прошлый год)",
        subgroup: GROUP_ADMISSION,
    },
    ParamSpec {
        key: "score_prev_dogovor",
        title: "Проходной балл (договор, прошлый год)",
        subgroup: GROUP_ADMISSION,
    },
    ParamSpec { key: "subjects", title: "Предметы ЕГЭ", subgroup: GROUP_ADMISSION },
];

/// The catalog as snapshot rows.
pub fn param_rows() -> Vec<ParamRow> {
    PARAMS
        .iter()
        .map(|p| ParamRow {
            param_key: p.key.to_string(),
            param_title: p.title.to_string(),
            subgroup: Some(p.subgroup.to_string()),
        })
        .collect()
}
