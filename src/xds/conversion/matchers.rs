use envoy_types::pb::envoy::config::route::v3::{
    header_matcher::HeaderMatchSpecifier, query_parameter_matcher::QueryParameterMatchSpecifier,
    route_match::PathSpecifier, HeaderMatcher as EnvoyHeaderMatcher,
    QueryParameterMatcher as EnvoyQueryParameterMatcher, RouteMatch,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{
    string_matcher::MatchPattern, RegexMatcher, StringMatcher,
};
use envoy_types::pb::google::protobuf::BoolValue;
use regex::Regex;

use super::errors::ConversionError;
use crate::storage::models::{HeaderMatcher, Matcher, PathSpecifier as InternalPathSpecifier, QueryParameterMatcher};

pub const METHOD_HEADER: &str = ":method";

/// The matcher used for routes that declare none
pub fn default_matcher() -> Matcher {
    Matcher {
        path_specifier: Some(InternalPathSpecifier::Prefix("/".to_string())),
        ..Default::default()
    }
}

/// Convert a route matcher.
///
/// Always returns a `RouteMatch`. Problems found along the way are returned
/// next to it so the route can still be emitted.
pub fn convert_matcher(matcher: &Matcher) -> (RouteMatch, Vec<ConversionError>) {
    let mut errors = Vec::new();

    let path_specifier = match &matcher.path_specifier {
        None => {
            errors.push(ConversionError::InvalidMatcher {
                reason: "no path specifier provided".to_string(),
            });
            None
        }
        Some(InternalPathSpecifier::Prefix(prefix)) => Some(PathSpecifier::Prefix(prefix.clone())),
        Some(InternalPathSpecifier::Exact(path)) => Some(PathSpecifier::Path(path.clone())),
        Some(InternalPathSpecifier::Regex(pattern)) => {
            check_regex(pattern, "path", &mut errors);
            Some(PathSpecifier::SafeRegex(regex_matcher(pattern)))
        }
    };

    let mut headers: Vec<EnvoyHeaderMatcher> = matcher
        .headers
        .iter()
        .map(|header| convert_header_matcher(header, &mut errors))
        .collect();

    if !matcher.methods.is_empty() {
        let pattern = matcher.methods.join("|");
        check_regex(&pattern, METHOD_HEADER, &mut errors);
        headers.push(EnvoyHeaderMatcher {
            name: METHOD_HEADER.to_string(),
            header_match_specifier: Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
                match_pattern: Some(MatchPattern::SafeRegex(regex_matcher(&pattern))),
                ..Default::default()
            })),
            ..Default::default()
        });
    }

    let query_parameters = matcher
        .query_parameters
        .iter()
        .map(|query| convert_query_parameter_matcher(query, &mut errors))
        .collect();

    let route_match = RouteMatch {
        path_specifier,
        case_sensitive: matcher.case_sensitive.map(|value| BoolValue { value }),
        headers,
        query_parameters,
        ..Default::default()
    };

    (route_match, errors)
}

fn convert_header_matcher(header: &HeaderMatcher, errors: &mut Vec<ConversionError>) -> EnvoyHeaderMatcher {
    let specifier = if header.value.is_empty() {
        HeaderMatchSpecifier::PresentMatch(true)
    } else if header.regex {
        check_regex(&header.value, &header.name, errors);
        HeaderMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(MatchPattern::SafeRegex(regex_matcher(&header.value))),
            ..Default::default()
        })
    } else {
        HeaderMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(MatchPattern::Exact(header.value.clone())),
            ..Default::default()
        })
    };

    EnvoyHeaderMatcher {
        name: header.name.clone(),
        invert_match: header.invert_match,
        header_match_specifier: Some(specifier),
        ..Default::default()
    }
}

fn convert_query_parameter_matcher(
    query: &QueryParameterMatcher,
    errors: &mut Vec<ConversionError>,
) -> EnvoyQueryParameterMatcher {
    let specifier = if query.value.is_empty() {
        QueryParameterMatchSpecifier::PresentMatch(true)
    } else {
        let pattern = if query.regex {
            check_regex(&query.value, &query.name, errors);
            MatchPattern::SafeRegex(regex_matcher(&query.value))
        } else {
            MatchPattern::Exact(query.value.clone())
        };
        QueryParameterMatchSpecifier::StringMatch(StringMatcher {
            match_pattern: Some(pattern),
            ..Default::default()
        })
    };

    EnvoyQueryParameterMatcher {
        name: query.name.clone(),
        query_parameter_match_specifier: Some(specifier),
        ..Default::default()
    }
}

fn regex_matcher(pattern: &str) -> RegexMatcher {
    RegexMatcher {
        regex: pattern.to_string(),
        ..Default::default()
    }
}

fn check_regex(pattern: &str, field: &str, errors: &mut Vec<ConversionError>) {
    if let Err(e) = Regex::new(pattern) {
        errors.push(ConversionError::InvalidMatcher {
            reason: format!("invalid regex for {}: {}", field, e),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matcher_is_root_prefix() {
        let (route_match, errors) = convert_matcher(&default_matcher());
        assert!(errors.is_empty());
        assert_eq!(route_match.path_specifier, Some(PathSpecifier::Prefix("/".to_string())));
    }

    #[test]
    fn test_methods_fold_into_method_header() {
        let matcher = Matcher {
            path_specifier: Some(InternalPathSpecifier::Exact("/pets".to_string())),
            methods: vec!["GET".to_string(), "POST".to_string()],
            case_sensitive: Some(false),
            ..Default::default()
        };
        let (route_match, errors) = convert_matcher(&matcher);
        assert!(errors.is_empty());
        assert_eq!(route_match.path_specifier, Some(PathSpecifier::Path("/pets".to_string())));
        assert_eq!(route_match.case_sensitive, Some(BoolValue { value: false }));
        assert_eq!(route_match.headers.len(), 1);
        assert_eq!(route_match.headers[0].name, ":method");
        match &route_match.headers[0].header_match_specifier {
            Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
                match_pattern: Some(MatchPattern::SafeRegex(regex)),
                ..
            })) => assert_eq!(regex.regex, "GET|POST"),
            other => panic!("unexpected specifier {:?}", other),
        }
    }

    #[test]
    fn test_header_and_query_matchers() {
        let matcher = Matcher {
            path_specifier: Some(InternalPathSpecifier::Prefix("/".to_string())),
            headers: vec![
                HeaderMatcher {
                    name: "x-present".to_string(),
                    ..Default::default()
                },
                HeaderMatcher {
                    name: "x-version".to_string(),
                    value: "v[12]".to_string(),
                    regex: true,
                    invert_match: true,
                },
                HeaderMatcher {
                    name: "x-env".to_string(),
                    value: "prod".to_string(),
                    ..Default::default()
                },
            ],
            query_parameters: vec![
                QueryParameterMatcher {
                    name: "debug".to_string(),
                    ..Default::default()
                },
                QueryParameterMatcher {
                    name: "page".to_string(),
                    value: "[0-9]+".to_string(),
                    regex: true,
                },
            ],
            ..Default::default()
        };
        let (route_match, errors) = convert_matcher(&matcher);
        assert!(errors.is_empty());

        assert_eq!(
            route_match.headers[0].header_match_specifier,
            Some(HeaderMatchSpecifier::PresentMatch(true))
        );
        assert!(route_match.headers[1].invert_match);
        assert_eq!(
            route_match.headers[2].header_match_specifier,
            Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
                match_pattern: Some(MatchPattern::Exact("prod".to_string())),
                ..Default::default()
            }))
        );
        assert_eq!(
            route_match.query_parameters[0].query_parameter_match_specifier,
            Some(QueryParameterMatchSpecifier::PresentMatch(true))
        );
        assert!(matches!(
            &route_match.query_parameters[1].query_parameter_match_specifier,
            Some(QueryParameterMatchSpecifier::StringMatch(StringMatcher {
                match_pattern: Some(MatchPattern::SafeRegex(_)),
                ..
            }))
        ));
    }

    #[test]
    fn test_problems_are_reported_but_match_is_built() {
        let matcher = Matcher {
            path_specifier: None,
            headers: vec![HeaderMatcher {
                name: "x-bad".to_string(),
                value: "(".to_string(),
                regex: true,
                invert_match: false,
            }],
            ..Default::default()
        };
        let (route_match, errors) = convert_matcher(&matcher);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("no path specifier provided"));
        assert!(errors[1].to_string().contains("x-bad"));
        assert!(route_match.path_specifier.is_none());
        assert_eq!(route_match.headers.len(), 1);
    }
}
