//! Static table of regional restriction levels used to warn customers before
//! they book a visit.

use common::types::covid::RestrictionLevel;
use common::types::covid::RestrictionLevel::{High, Low, Medium};
use common::utils::{clean_city, title_case};

type Cities = &'static [(&'static str, RestrictionLevel)];
type States = &'static [(&'static str, Cities)];

const RESTRICTIONS: &[(&str, States)] = &[
    (
        "AU",
        &[
            (
                "SA",
                &[
                    ("Adelaide", Low),
                    ("Mount Gambier", Medium),
                    ("Port Augusta", Low),
                    ("Whyalla", Medium),
                ],
            ),
            (
                "NSW",
                &[
                    ("Sydney", High),
                    ("Newcastle", Medium),
                    ("Wollongong", Medium),
                    ("Central Coast", Low),
                ],
            ),
            (
                "VIC",
                &[
                    ("Melbourne", High),
                    ("Parkville", High),
                    ("Geelong", Medium),
                    ("Ballarat", Low),
                    ("Bendigo", Low),
                ],
            ),
            (
                "QLD",
                &[
                    ("Brisbane", Medium),
                    ("Gold Coast", Medium),
                    ("Cairns", Low),
                    ("Townsville", Low),
                ],
            ),
            (
                "WA",
                &[
                    ("Perth", Low),
                    ("Fremantle", Low),
                    ("Bunbury", Low),
                    ("Geraldton", Low),
                ],
            ),
            (
                "TAS",
                &[
                    ("Hobart", Low),
                    ("Launceston", Low),
                    ("Devonport", Low),
                    ("Burnie", Low),
                ],
            ),
            (
                "NT",
                &[
                    ("Darwin", Medium),
                    ("Alice Springs", Low),
                    ("Katherine", Low),
                    ("Tennant Creek", Low),
                ],
            ),
            ("ACT", &[("Canberra", Medium), ("Queanbeyan", Medium)]),
        ],
    ),
    (
        "US",
        &[
            (
                "CA",
                &[
                    ("Los Angeles", High),
                    ("San Francisco", High),
                    ("San Diego", Medium),
                    ("Sacramento", Medium),
                    ("San Jose", Medium),
                ],
            ),
            (
                "NY",
                &[
                    ("New York", High),
                    ("Buffalo", Medium),
                    ("Rochester", Medium),
                    ("Yonkers", Medium),
                    ("Syracuse", Low),
                ],
            ),
            (
                "TX",
                &[
                    ("Houston", Medium),
                    ("Dallas", Medium),
                    ("Austin", Medium),
                    ("San Antonio", Medium),
                    ("Fort Worth", Low),
                ],
            ),
            (
                "FL",
                &[
                    ("Miami", High),
                    ("Orlando", Medium),
                    ("Tampa", Medium),
                    ("Jacksonville", Medium),
                    ("St. Petersburg", Medium),
                ],
            ),
            (
                "IL",
                &[
                    ("Chicago", Medium),
                    ("Aurora", Low),
                    ("Naperville", Low),
                    ("Joliet", Low),
                    ("Rockford", Low),
                ],
            ),
        ],
    ),
    (
        "CA",
        &[
            (
                "ON",
                &[
                    ("Toronto", Medium),
                    ("Ottawa", Medium),
                    ("Hamilton", Low),
                    ("London", Low),
                    ("Kitchener", Low),
                ],
            ),
            (
                "BC",
                &[
                    ("Vancouver", Medium),
                    ("Victoria", Medium),
                    ("Surrey", Low),
                    ("Burnaby", Low),
                    ("Richmond", Low),
                ],
            ),
            (
                "QC",
                &[
                    ("Montreal", High),
                    ("Quebec City", Medium),
                    ("Laval", Medium),
                    ("Gatineau", Low),
                    ("Longueuil", Low),
                ],
            ),
            (
                "AB",
                &[
                    ("Calgary", Medium),
                    ("Edmonton", Medium),
                    ("Red Deer", Low),
                    ("Lethbridge", Low),
                    ("Medicine Hat", Low),
                ],
            ),
            (
                "MB",
                &[
                    ("Winnipeg", Low),
                    ("Brandon", Low),
                    ("Steinbach", Low),
                    ("Portage La Prairie", Low),
                ],
            ),
        ],
    ),
    (
        "GB",
        &[
            (
                "ENG",
                &[
                    ("London", High),
                    ("Manchester", Medium),
                    ("Birmingham", Medium),
                    ("Leeds", Medium),
                    ("Liverpool", Medium),
                    ("Newcastle", Low),
                    ("Sheffield", Medium),
                    ("Bristol", Medium),
                    ("Leicester", Medium),
                    ("Coventry", Low),
                ],
            ),
            (
                "SCT",
                &[
                    ("Edinburgh", Medium),
                    ("Glasgow", Medium),
                    ("Aberdeen", Low),
                    ("Dundee", Low),
                    ("Inverness", Low),
                ],
            ),
            (
                "WLS",
                &[
                    ("Cardiff", Medium),
                    ("Swansea", Medium),
                    ("Newport", Low),
                    ("Wrexham", Low),
                    ("Bangor", Low),
                ],
            ),
            (
                "NIR",
                &[
                    ("Belfast", Medium),
                    ("Derry", Low),
                    ("Lisburn", Low),
                    ("Newtownabbey", Low),
                ],
            ),
        ],
    ),
];

fn find<'a, T>(entries: &'a [(&'static str, T)], key: &str) -> Option<&'a T> {
    entries
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
}

/// Most frequent level among the cities; ties go to the level seen first.
fn most_common(cities: &[(&str, RestrictionLevel)]) -> RestrictionLevel {
    let mut counts: Vec<(RestrictionLevel, usize)> = Vec::new();
    for (_, level) in cities {
        match counts.iter_mut().find(|(seen, _)| *seen == *level) {
            Some((_, count)) => *count += 1,
            None => counts.push((*level, 1)),
        }
    }
    let mut best: Option<(RestrictionLevel, usize)> = None;
    for (level, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((level, count));
        }
    }
    best.map_or(RestrictionLevel::Unknown, |(level, _)| level)
}

pub fn normalize_city(city: Option<&str>) -> Option<String> {
    let cleaned = title_case(&clean_city(city?));
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn lookup(country: &str, state: Option<&str>, city: Option<&str>) -> RestrictionLevel {
    let country = country.trim().to_uppercase();
    let state = state
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());
    let city = normalize_city(city);

    let Some(states) = find(RESTRICTIONS, &country) else {
        return RestrictionLevel::Unknown;
    };

    match (state, city) {
        (None, Some(city)) => states
            .iter()
            .find_map(|(_, cities)| find(cities, &city).copied())
            .unwrap_or(RestrictionLevel::Unknown),
        (None, None) => RestrictionLevel::Unknown,
        (Some(state), city) => {
            let Some(cities) = find(states, &state) else {
                return RestrictionLevel::Unknown;
            };
            match city {
                None => most_common(cities),
                Some(city) => find(cities, &city)
                    .copied()
                    .unwrap_or(RestrictionLevel::Unknown),
            }
        }
    }
}
